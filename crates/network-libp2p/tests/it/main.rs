mod swarm_tests;
